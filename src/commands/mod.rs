// Reconcile a host, host group, volume or volume set
pub mod apply;

// Read-only queries
pub mod facts;
