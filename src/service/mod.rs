mod driver;
mod hooks;


pub use driver::Service;
pub use hooks::{ServiceHooks, StartContext};
