pub mod da;
pub mod inp;
pub mod pli;
pub mod plot;

pub(crate) mod util;
