#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UndistortError {
    #[error("frame size {actual_width}x{actual_height} does not match the undistortion map {expected_width}x{expected_height}")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("new camera matrix is not invertible")]
    SingularCameraMatrix,
    #[error("undistortion map size must be positive (got {width}x{height})")]
    EmptySize { width: u32, height: u32 },
}
