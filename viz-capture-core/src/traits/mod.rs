pub mod backend;
pub mod packet_source;
pub mod pcm_sink;
