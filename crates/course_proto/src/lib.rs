pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("course_descriptor");

pub mod greet {
    tonic::include_proto!("greet.v1");
}

pub mod calculator {
    tonic::include_proto!("calculator.v1");
}

pub mod blog {
    tonic::include_proto!("blog.v1");
}
