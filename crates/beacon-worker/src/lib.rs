// Sender worker
//
// Runs the long task (bulk SMS dispatch) while reporting progress through
// a session channel. Dispatch is the primary side effect; reporting is
// best-effort and never fails the send.

pub mod blast;
pub mod dispatcher;
pub mod providers;
pub mod runner;

pub use blast::{BlastSender, BlastSummary, ReceiverGonePolicy};
pub use dispatcher::{DeliveryReceipt, MessageDispatcher, OutboundSms};
pub use providers::{create_dispatcher, DispatcherConfig};
pub use runner::BlastRunner;
