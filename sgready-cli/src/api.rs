pub mod heartbeat;
pub mod homewizard;
pub mod modbus;
