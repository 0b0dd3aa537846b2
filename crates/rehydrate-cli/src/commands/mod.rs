pub(crate) mod decode;
pub(crate) mod inspect;
pub(crate) mod replay;
