pub mod finalizer;
pub mod notify;
pub mod store;

pub use finalizer::{FinalizeOutcome, Finalizer};
pub use notify::{
    build_notification, LoggingNotificationDispatcher, NotificationDispatcher,
    ReservationNotification,
};
pub use store::{InsertOutcome, ReservationStore, SqliteReservationStore};
