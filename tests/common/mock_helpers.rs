//! Mock construction helpers

use mockall::mock;
use preproc_rs::query::{JsonDoc, JsonQuery, SnmpTable, SnmpWalk, XmlQuery};

mock! {
    pub Json {}

    impl JsonQuery for Json {
        fn open(&self, text: &str) -> Result<JsonDoc, String>;
        fn query(&self, doc: &JsonDoc, path: &str) -> Result<Option<String>, String>;
    }
}

mock! {
    pub Snmp {}

    impl SnmpWalk for Snmp {
        fn parse(&self, text: &str) -> Result<SnmpTable, String>;
    }
}

mock! {
    pub Xml {}

    impl XmlQuery for Xml {
        fn query_xpath(&self, text: &str, expression: &str) -> Result<Option<String>, String>;
        fn to_json(&self, text: &str) -> Result<String, String>;
    }
}
