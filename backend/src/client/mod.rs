//! HTTP clients of other platform services

pub mod machine;

pub use machine::{
    ClientError, MachineDescriptor, MachineServiceClient, MachineState, ProcessDescriptor,
};
