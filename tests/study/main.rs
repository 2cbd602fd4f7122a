#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

mod ask_tell;
mod builder;
mod enqueue;
mod multi_worker;
mod optimize;
