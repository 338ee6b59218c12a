mod close;
mod common;
mod data;
mod handshake;
