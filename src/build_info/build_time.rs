include!(concat!(env!("OUT_DIR"), "/build_time.rs"));
