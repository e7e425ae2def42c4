pub mod csv;
pub mod netcdf;
pub mod project;
pub mod results;
