// ==============================================================================
// lib.rs - SNPXCheck Identity Engine Library
// ==============================================================================
// Description: Library interface for the GeneMapper identity check modules
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

pub mod aggregator;
pub mod audit;
pub mod comparator;
pub mod config;
pub mod genotype;
pub mod input;
pub mod models;
pub mod output;
pub mod panel;
pub mod parsers;
pub mod processor;
pub mod validator;

#[cfg(test)]
mod fixtures;
