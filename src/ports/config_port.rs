//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Every key/value pair in `section`, sorted by key. Empty when the
    /// section is absent. Used for open-ended sections such as `[params]`.
    fn get_section(&self, section: &str) -> Vec<(String, String)>;
}
