#![forbid(unsafe_code)]

//! Console walkthrough of `bindchain-core`.
//!
//! A notifying `Source` drives a silent `Target` through two chains: the
//! parity of `Source.Id` written (and announced) into `Target.Id`, and the
//! raw `Source.Id` written silently into `Target.Age`.

pub mod cli;
pub mod logging;
pub mod model;
pub mod walkthrough;
