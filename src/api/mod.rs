pub mod classroom_routes;
pub mod classroom_websocket;

pub use classroom_routes::routes;
