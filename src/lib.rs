//! Employee registry client for a Supabase project: session mirror, employee
//! list cache, route guard, toast notifications and an interactive console.

pub mod config;
pub mod employee;
pub mod guard;
pub mod notify;
pub mod shell;
pub mod state;
pub mod supabase;
