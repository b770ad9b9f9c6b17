pub mod backup_config;
pub mod compare;
pub mod log_sink;
pub mod naming;
pub mod result_error;
pub mod retention;
pub mod rotation;
pub mod targets;
pub mod writer;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
