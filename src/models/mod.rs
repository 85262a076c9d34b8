pub mod booking;
pub mod parcel;
pub mod public;
pub mod tracking;
