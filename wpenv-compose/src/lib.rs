//! Docker Compose and Dockerfile generation for resolved configurations.
//!
//! Consumes the typed configuration produced by `wpenv-config` and renders
//! the two artifacts the external Docker Compose collaborator runs from:
//! `docker-compose.yml` and `Dockerfile`, both written under the work
//! directory.

pub mod compose;
pub mod dockerfile;
pub mod host_user;

pub use compose::{
    build_compose_config, phpunit_image_tag, wordpress_image, write_docker_compose, ComposeBuild,
    ComposeConfig, ComposeService,
};
pub use dockerfile::{render_dockerfile, write_dockerfile};
pub use host_user::HostUser;
