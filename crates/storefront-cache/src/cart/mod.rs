//! Shopping cart held on the client and merged into the server cart at login

mod lines;
mod local;
mod reconcile;

pub use lines::{
    CartLine, ProductQuery, ProductSnapshot, Promotion, ReconciledCartLine, merge_lines,
};
pub use local::{CART_KEY, LocalCart};
pub use reconcile::{CartEndpoints, CartReconciler, ReconcileState};
