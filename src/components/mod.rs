//! Component and hook system
//!
//! Items and skills are flat bags of components; every engine query about
//! them goes through the dispatcher in [`dispatch`] rather than through
//! type-specific branching. Adding a new behaviour means adding a
//! component variant and wiring it into the hooks it answers.

pub mod component;
pub mod dispatch;
pub mod hooks;
