/// Business logic behind the GraphQL resolvers and REST image controllers
pub mod images;
pub mod posts;
pub mod users;

pub use images::{DecodedImage, ImageService};
pub use posts::{PageRequest, PostService};
pub use users::UserService;
