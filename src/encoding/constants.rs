/// `application/json`
pub(crate) const MEDIA_JSON: &str = "application/json";
/// `text/json`
pub(crate) const MEDIA_TEXT_JSON: &str = "text/json";
/// `application/xml`
pub(crate) const MEDIA_XML: &str = "application/xml";
/// `text/xml`
pub(crate) const MEDIA_TEXT_XML: &str = "text/xml";
/// `application/x-www-form-urlencoded`
pub(crate) const MEDIA_FORM: &str = "application/x-www-form-urlencoded";
/// `text/uon`
pub(crate) const MEDIA_UON: &str = "text/uon";

/// XML attribute holding the kind of an element's value.
pub(crate) const XML_TYPE: &str = "_type";
/// XML attribute holding a key that is not a valid element name.
pub(crate) const XML_KEY: &str = "_key";
/// XML element name used for such keys.
pub(crate) const XML_ENTRY: &str = "_entry";

/// XML kind of a null.
pub(crate) const KIND_NULL: &str = "null";
/// XML kind of a boolean.
pub(crate) const KIND_BOOL: &str = "boolean";
/// XML kind of a number.
pub(crate) const KIND_NUMBER: &str = "number";
/// XML kind of a string.
pub(crate) const KIND_STRING: &str = "string";
/// XML kind of a sequence.
pub(crate) const KIND_ARRAY: &str = "array";
/// XML kind of a mapping or record.
pub(crate) const KIND_OBJECT: &str = "object";

/// URL-encoding key for a top-level value that is neither a map nor a sequence.
pub(crate) const URL_VALUE: &str = "_value";

/// Characters left alone by URL percent-encoding.
pub(crate) const URL_SAFE: &str = "-_.!*()',=@~:/";
/// Characters that force quoting of a UON string.
pub(crate) const UON_SPECIAL: &str = "(),=@'~&";
