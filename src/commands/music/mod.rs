pub mod clear;
pub mod leave;
pub mod mi;
pub mod queue;

pub mod utils;

use crate::{CommandResult, Context};
