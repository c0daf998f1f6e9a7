pub(crate) mod endpoint;
pub(crate) mod frame;
