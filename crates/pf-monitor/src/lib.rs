//! PF9802 monitor - prints readings from a meter on a serial line

pub mod output;
