mod projector_desc;

pub use projector_desc::ProjectorDesc;
