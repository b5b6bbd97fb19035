#[derive(Debug)]
pub enum EditError {
    Terminal(String),
    Io(std::io::Error),
}

impl EditError {
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }
}

impl From<std::io::Error> for EditError {
    fn from(error: std::io::Error) -> Self {
        EditError::Io(error)
    }
}
