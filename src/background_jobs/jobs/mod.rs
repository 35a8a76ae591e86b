mod periodic_sync;

pub use periodic_sync::PeriodicSyncJob;
