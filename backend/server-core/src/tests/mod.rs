mod registry;
mod state;
