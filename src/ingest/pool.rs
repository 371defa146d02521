//! Thread-local parser pool for reusing tree-sitter Parser instances.
//!
//! Creating a tree-sitter parser per file is wasteful during a parallel
//! scan. Each rayon worker thread keeps one lazily-initialized parser per
//! language behind a `RefCell`; no locks, immutable after init.

use std::cell::RefCell;

use anyhow::Result;

use super::detect::Language;

thread_local! {
    static PYTHON_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static TYPESCRIPT_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static TSX_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static JAVASCRIPT_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static CSHARP_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
}

fn grammar_for(language: Language) -> tree_sitter::Language {
    match language {
        Language::Python => tree_sitter_python::language(),
        Language::TypeScript => tree_sitter_typescript::language_typescript(),
        Language::Tsx => tree_sitter_typescript::language_tsx(),
        Language::JavaScript => tree_sitter_javascript::language(),
        Language::CSharp => tree_sitter_c_sharp::language(),
    }
}

fn cell_for(language: Language) -> &'static std::thread::LocalKey<RefCell<Option<tree_sitter::Parser>>> {
    match language {
        Language::Python => &PYTHON_PARSER,
        Language::TypeScript => &TYPESCRIPT_PARSER,
        Language::Tsx => &TSX_PARSER,
        Language::JavaScript => &JAVASCRIPT_PARSER,
        Language::CSharp => &CSHARP_PARSER,
    }
}

/// Execute `f` with this thread's parser for the given language.
///
/// The parser is created on first use per thread and reused afterwards.
pub fn with_parser<F, R>(language: Language, f: F) -> Result<R>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    cell_for(language).with(|parser_cell| {
        let mut parser_ref = parser_cell.borrow_mut();
        if parser_ref.is_none() {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&grammar_for(language))?;
            *parser_ref = Some(parser);
        }
        Ok(f(parser_ref
            .as_mut()
            .expect("parser initialized by the branch above")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_reuse_same_thread() {
        let addr1 = with_parser(Language::Python, |p| p as *const _ as usize).unwrap();
        let addr2 = with_parser(Language::Python, |p| p as *const _ as usize).unwrap();
        assert_eq!(addr1, addr2, "parser should be reused in same thread");
    }

    #[test]
    fn test_all_languages_parse() {
        let cases: [(Language, &[u8]); 5] = [
            (Language::Python, b"def test(): pass"),
            (Language::TypeScript, b"function test(): void {}"),
            (Language::Tsx, b"const x = <App />;"),
            (Language::JavaScript, b"function test() {}"),
            (Language::CSharp, b"class Test {}"),
        ];
        for (lang, source) in cases {
            let parsed = with_parser(lang, |parser| parser.parse(source, None).is_some());
            assert!(parsed.is_ok() && parsed.unwrap(), "{lang:?} should parse");
        }
    }

    #[test]
    fn test_parsers_work_across_threads() {
        let handle = std::thread::spawn(|| {
            with_parser(Language::Python, |p| p.parse(b"x = 1", None).is_some()).unwrap()
        });
        let main = with_parser(Language::Python, |p| p.parse(b"y = 2", None).is_some()).unwrap();
        assert!(main);
        assert!(handle.join().unwrap());
    }
}
