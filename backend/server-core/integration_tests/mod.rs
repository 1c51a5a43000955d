mod helpers;
mod raw_socket;
mod session;
