use thiserror::Error;

/// Every handler in the workspace reports failures through this type.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("missing or invalid configuration value {0}")]
    Configuration(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("no record found for {0}")]
    NotFound(String),

    #[error("record already exists for {0}")]
    Conflict(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),
}

impl ViewError {
    pub fn status_code(&self) -> u16 {
        match self {
            ViewError::InvalidParameters(_) => 400,
            ViewError::NotFound(_) => 404,
            ViewError::Conflict(_) => 409,
            ViewError::Malformed(_) => 422,
            ViewError::Configuration(_) => 500,
            ViewError::Upstream(_) => 502,
        }
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(e: serde_json::Error) -> Self {
        ViewError::Malformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ViewError::InvalidParameters("userId".into()).status_code(), 400);
        assert_eq!(ViewError::NotFound("u1".into()).status_code(), 404);
        assert_eq!(ViewError::Conflict("u1".into()).status_code(), 409);
        assert_eq!(ViewError::Configuration("TABLE_NAME".into()).status_code(), 500);
        assert_eq!(ViewError::Upstream("timeout".into()).status_code(), 502);
    }

    #[test]
    fn configuration_error_names_the_variable() {
        let e = ViewError::Configuration("TABLE_NAME".into());
        assert_eq!(e.to_string(), "missing or invalid configuration value TABLE_NAME");
    }
}
