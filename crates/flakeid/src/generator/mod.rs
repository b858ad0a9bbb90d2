mod atomic;
mod id_generator;
mod interface;
mod lock;
mod mutex;
mod policy;
mod status;
#[cfg(test)]
mod tests;

pub use atomic::*;
pub use id_generator::*;
pub use interface::*;
pub use lock::*;
pub(crate) use mutex::*;
pub use policy::*;
pub use status::*;
