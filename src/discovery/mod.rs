pub mod kubernetes;
pub mod member;

pub use kubernetes::{admin_port_from_service, lookup_admin_port, KubePodLister, KubeSecretStore};
pub use member::{first_ready_member, MemberSelector, PodLister, StaticPodLister};
