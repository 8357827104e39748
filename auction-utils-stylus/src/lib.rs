//! Shared helpers for the Dutch auction contracts.
//!
//! The price curve lives here so both payment variants compute the exact
//! same figure a client can predict off-chain from the public parameters.

#![cfg_attr(not(test), no_std)]

pub mod price;
