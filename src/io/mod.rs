#[cfg(target_family = "unix")]
mod file;
#[cfg(target_family = "unix")]
pub(crate) use file::File;

#[cfg(not(target_family = "unix"))]
compile_error!("Specified target platform is not supported (only unix family supported)");
