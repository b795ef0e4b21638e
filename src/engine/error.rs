#[derive(Debug)]
pub enum EngineError {
    /// Request failed a semantic check (bad date, empty items, bad status...).
    Validation(String),
    EquipmentNotFound(String),
    BookingNotFound(String),
    DuplicateEquipment(String),
    DuplicateBookingCode(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::EquipmentNotFound(name) => write!(f, "equipment not found: {name}"),
            EngineError::BookingNotFound(code) => write!(f, "booking not found: {code}"),
            EngineError::DuplicateEquipment(name) => {
                write!(f, "equipment already exists: {name}")
            }
            EngineError::DuplicateBookingCode(code) => {
                write!(f, "booking code already exists: {code}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
