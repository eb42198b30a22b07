//! Error types for Trivion Core

use thiserror::Error;

use crate::models::Phase;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("display name is invalid")]
    NameInvalid,

    #[error("display name is already taken")]
    NameTaken,

    #[error("room already has an administrator")]
    AdminExists,

    #[error("room not found")]
    RoomNotFound,

    #[error("member not found")]
    MemberNotFound,

    #[error("wrong room password")]
    BadPassword,

    #[error("operation not allowed in phase {0}")]
    PhaseViolation(Phase),

    #[error("administrator privileges required")]
    NotAuthorized,

    #[error("answer already submitted for this question")]
    AlreadyAnswered,

    #[error("option index out of range")]
    OptionOutOfRange,

    #[error("room code space exhausted")]
    CapacityExhausted,

    #[error("connection is not attached to a room")]
    NotConnected,

    #[error("invalid question: {0}")]
    QuestionInvalid(String),
}

impl Error {
    /// Message shown to players and administrators. The product ships in
    /// Brazilian Portuguese; log lines stay in English.
    pub fn user_message(&self) -> String {
        match self {
            Error::NameInvalid => "Nome deve ter entre 1 e 20 caracteres imprimíveis".into(),
            Error::NameTaken => "Este nome já está em uso".into(),
            Error::AdminExists => "A sala já possui um administrador".into(),
            Error::RoomNotFound => "Sala não encontrada".into(),
            Error::MemberNotFound => "Jogador não encontrado".into(),
            Error::BadPassword => "Senha incorreta".into(),
            Error::PhaseViolation(_) => "Ação não permitida neste momento".into(),
            Error::NotAuthorized => "Apenas o administrador pode fazer isso".into(),
            Error::AlreadyAnswered => "Você já respondeu esta pergunta".into(),
            Error::OptionOutOfRange => "Resposta inválida".into(),
            Error::CapacityExhausted => "Não foi possível alocar um código de sala".into(),
            Error::NotConnected => "Você não está em uma sala".into(),
            Error::QuestionInvalid(_) => "Pergunta inválida".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
