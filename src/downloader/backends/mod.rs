// Metadata provider backends

pub mod ytdlp;

pub use ytdlp::YtDlpProvider;
