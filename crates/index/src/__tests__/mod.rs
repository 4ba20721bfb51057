mod helpers;

mod config;
mod listener;
mod mutations;
mod ordering;
