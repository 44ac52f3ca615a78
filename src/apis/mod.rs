pub mod dataset;
pub mod object;

pub use dataset::DatasetApi;
pub use object::ObjectApi;
