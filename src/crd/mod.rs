//! Resource types read by the validator.
//!
//! - `VirtualMachine`: the KubeVirt VM (`kubevirt.io/v1`) being admitted
//! - `Template`: the OpenShift template a VM was created from

pub mod template;
pub mod virtual_machine;

pub use template::Template;
pub use virtual_machine::*;
