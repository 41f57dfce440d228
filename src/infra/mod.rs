pub mod http_client;
pub mod supabase_storage;

pub use http_client::ReqwestHttp;
pub use supabase_storage::SupabaseStorage;
