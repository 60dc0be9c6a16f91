//! Product, listing and block pages captured in the shapes the extractor handles

#![allow(dead_code)]

pub const SAUVAGE_URL: &str = "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html";
pub const LIGHT_BLUE_URL: &str = "https://www.fragrantica.es/perfume/Dolce-Gabbana/Light-Blue-485.html";
pub const BLEU_URL: &str = "https://www.fragrantica.com/perfume/Chanel/Bleu-de-Chanel-9099.html";
pub const BRAND_URL: &str = "https://www.fragrantica.com/designers/Dior.html";

/// English product page with schema.org markup, a scoped notes pyramid,
/// accord bars and vote widgets.
pub const SAUVAGE_EN: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Sauvage Dior cologne - a fragrance for men 2015</title>
  <meta property="og:title" content="Sauvage Dior cologne - a fragrance for men 2015">
</head>
<body>
  <div id="main-content" itemscope itemtype="https://schema.org/Product">
    <h1 itemprop="name">Sauvage Dior for men</h1>
    <p itemprop="brand" itemscope itemtype="https://schema.org/Brand">
      <a href="/designers/Dior.html"><span itemprop="name">Dior</span></a>
    </p>
    <picture>
      <source type="image/avif" srcset="https://fimgs.net/mdimg/perfume-thumbs/375x500.31861.avif 1x">
      <img itemprop="image" src="https://fimgs.net/mdimg/perfume/375x500.31861.jpg" alt="Sauvage Dior for men">
    </picture>

    <div itemprop="aggregateRating" itemscope itemtype="https://schema.org/AggregateRating">
      Perfume rating <span itemprop="ratingValue">4.02</span> out of 5
    </div>

    <div itemprop="description">
      <p>Sauvage by Dior is an Aromatic Fougere fragrance for men. Sauvage was launched in 2015.
      The nose behind this fragrance is Francois Demachy. This Eau de Toilette opens with
      Calabrian bergamot and pepper over a dry woody trail.</p>
    </div>

    <div class="perfumer">
      <a href="/noses/Francois_Demachy.html"><img src="https://fimgs.net/mdimg/nez/m.7.jpg" alt="">Francois Demachy</a>
    </div>

    <div class="cell accord-box">
      <div class="accord-bar" style="background: rgb(106, 194, 216); width: 100%;">fresh spicy</div>
      <div class="accord-bar" style="background: rgb(188, 77, 16); width: 68.2%;">amber</div>
      <div class="accord-bar" style="background: rgb(249, 255, 82); width: 61%;">citrus</div>
    </div>

    <div id="pyramid">
      <h4>Top Notes</h4>
      <div>
        <a href="/notes/Calabrian-bergamot-75.html"><img src="https://fimgs.net/mdimg/sastojci/t.75.jpg" alt="Calabrian bergamot">Calabrian bergamot</a>
        <a href="/notes/Pepper-152.html">Pepper</a>
      </div>
      <h4>Middle Notes</h4>
      <div>
        <a href="/notes/Sichuan-Pepper-1180.html">Sichuan Pepper</a>
        <a href="/notes/Lavender-2.html">Lavender</a>
        <a href="/notes/Pink-Pepper-111.html">Pink Pepper</a>
      </div>
      <h4>Base Notes</h4>
      <div>
        <a href="/notes/Ambroxan-1209.html">Ambroxan</a>
        <a href="/notes/Cedar-10.html">Cedar</a>
        <a href="/notes/Labdanum-98.html">Labdanum</a>
      </div>
    </div>

    <div class="longevity-block">
      <span>Longevity</span>
      <ul>
        <li>very weak 310</li>
        <li>weak 420</li>
        <li>moderate 2,150</li>
        <li>long lasting 5,870</li>
        <li>eternal 1,250</li>
      </ul>
    </div>

    <div class="sillage-block">
      <span>Sillage</span>
      <ul>
        <li>intimate 800</li>
        <li>moderate 3,000</li>
        <li>strong 4,000</li>
        <li>enormous 2,200</li>
      </ul>
    </div>

    <div class="season-block">
      <div class="vote-row">winter 1,500</div>
      <div class="vote-row">spring 4,000</div>
      <div class="vote-row">summer 6,000</div>
      <div class="vote-row">fall 3,000</div>
      <div class="vote-row">day 6,000</div>
      <div class="vote-row">night 2,400</div>
    </div>
  </div>
</body>
</html>"#;

/// Spanish locale page without schema markup: name from the title, brand
/// from the designer link, notes introduced by bold headers.
pub const LIGHT_BLUE_ES: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <title>Light Blue Dolce&amp;Gabbana perfume - una fragancia para Mujeres 2001</title>
</head>
<body>
  <h1>Light Blue Dolce&amp;Gabbana para Mujeres</h1>
  <a href="/disenadores/Dolce-Gabbana.html">Dolce&amp;Gabbana</a>
  <div class="valoracion" data-rating="7.8"></div>

  <p>Light Blue de Dolce&amp;Gabbana es una fragancia de la familia olfativa Floral Frutal para Mujeres.
  Light Blue fue lanzada en 2001. La nariz detras de esta fragancia es Olivier Cresp.</p>

  <div class="nariz"><a href="/narices/Olivier-Cresp.html">Olivier Cresp</a></div>

  <h3>Acordes principales</h3>
  <div>
    <a href="/acordes/citrico">Cítrico</a>
    <a href="/acordes/amaderado">Amaderado</a>
    <a href="/acordes/afrutado">Afrutado</a>
  </div>

  <div class="notas">
    <b>Notas de Salida</b>
    <div><a href="/notas/Limon-siciliano-78.html">Limón siciliano</a><a href="/notas/Manzana-23.html">Manzana</a></div>
    <b>Notas de Corazón</b>
    <div><a href="/notas/Bambu-338.html">Bambú</a><a href="/notas/Jazmin-21.html">Jazmín</a></div>
    <b>Notas de Fondo</b>
    <div><a href="/notas/Cedro-10.html">Cedro</a><a href="/notas/Almizcle-4.html">Almizcle</a></div>
  </div>

  <div class="bloque-longevidad">
    <span>Longevidad</span>
    <table>
      <tr><td>débil</td><td>120</td></tr>
      <tr><td>moderada</td><td>900</td></tr>
      <tr><td>duradera</td><td>600</td></tr>
    </table>
  </div>
</body>
</html>"#;

/// Popular product page whose opening text carries vote counts and words
/// that contain block phrases.
pub const BLEU_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Bleu de Chanel Chanel cologne - a fragrance for men 2010</title>
</head>
<body>
  <div id="main-content" itemscope itemtype="https://schema.org/Product">
    <h1 itemprop="name">Bleu de Chanel Chanel for men</h1>
    <p itemprop="brand" itemscope itemtype="https://schema.org/Brand">
      <a href="/designers/Chanel.html"><span itemprop="name">Chanel</span></a>
    </p>
    <div itemprop="aggregateRating" itemscope itemtype="https://schema.org/AggregateRating">
      Perfume rating <span itemprop="ratingValue">4.29</span> out of 5
      with <span itemprop="ratingCount">1,429</span> votes
    </div>
    <div itemprop="description">
      <p>Bleu de Chanel by Chanel is a Woody Aromatic fragrance for men. Bleu de Chanel was
      launched in 2010. An unblocked, airy composition of grapefruit and incense over dry cedar.</p>
    </div>
  </div>
</body>
</html>"#;

/// Throttling page served instead of product content.
pub const RATE_LIMIT_PAGE: &str = r#"<html>
<head><title>429 Too Many Requests</title></head>
<body><h1>Too Many Requests</h1><p>Please try again later.</p></body>
</html>"#;

/// Brand listing with product links, duplicates and unrelated anchors.
pub const BRAND_PAGE: &str = r#"<html><body>
  <h1>Dior perfumes and colognes</h1>
  <a href="/perfume/Dior/Sauvage-31861.html">Sauvage</a>
  <a href="/perfume/Dior/Sauvage-31861.html#reviews">Sauvage reviews</a>
  <a href="https://www.fragrantica.com/perfume/Dior/J-adore-210.html?ref=brand">J'adore</a>
  <a href="/perfume/Dior/Miss-Dior-2011-13153.html">Miss Dior</a>
  <a href="/designers/Dior.html">Dior</a>
  <a href="/news/Dior-launch.html">News</a>
</body></html>"#;

pub const SITEMAP_INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://www.fragrantica.com/sitemap_perfumes_1.xml</loc></sitemap>
  <sitemap><loc>https://www.fragrantica.com/sitemap_perfumes_2.xml</loc></sitemap>
</sitemapindex>"#;

pub const SITEMAP_PERFUMES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html</loc></url>
  <url><loc>https://www.fragrantica.com/perfume/Chanel/Bleu-de-Chanel-9099.html</loc></url>
  <url><loc>https://www.fragrantica.com/designers/Chanel.html</loc></url>
</urlset>"#;
