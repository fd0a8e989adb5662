pub type ChoromapResult<T> = Result<T, ChoromapError>;

#[derive(thiserror::Error, Debug)]
pub enum ChoromapError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChoromapError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ChoromapError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(ChoromapError::data("x").to_string().contains("data error:"));
        assert!(
            ChoromapError::geometry("x")
                .to_string()
                .contains("geometry error:")
        );
        assert!(
            ChoromapError::render("x")
                .to_string()
                .contains("render error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ChoromapError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
