//! Paywall engine - order confirmation and membership reconciliation.
//!
//! Reconciles paid-membership state across one-time purchase channels
//! (Alipay, WeChat) and subscription channels (Stripe, Apple, B2B):
//! classifying purchases, confirming orders idempotently, prorating
//! unused time into upgrade credit, banking deferred days on an add-on
//! ledger, and absorbing at-least-once Stripe webhook deliveries.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
