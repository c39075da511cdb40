pub mod login;
pub mod register;
pub mod session;
pub mod types;

pub use login::*;
pub use register::*;
pub use session::*;
