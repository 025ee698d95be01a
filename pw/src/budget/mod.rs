//! Context budgeter
//!
//! Decides how much supplementary content (code, history, file metadata,
//! related work) may ride along with a request, and trims it to fit.

mod attach;
mod policy;

pub use attach::{AttachedContext, ContextItem, ERROR_WINDOW_LINES, Inclusion, attach, extract_error_window, outline};
pub use policy::{AllocationPolicy, BudgetAllocation, ContentCategory, allocate};
